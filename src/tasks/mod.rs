pub mod fingerprint;
pub mod record;
