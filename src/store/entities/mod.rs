pub mod canonical_value;
pub mod edition;
pub mod hub;
pub mod media_asset;
pub mod metadata_claim;
pub mod provider_registration;
pub mod transaction_log;
pub mod work;
