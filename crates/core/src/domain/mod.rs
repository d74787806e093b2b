pub mod customs;
pub mod intent;
pub mod shipment;
pub mod summary;
