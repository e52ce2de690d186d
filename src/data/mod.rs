pub mod mtf_store;

pub use mtf_store::MtfStore;
