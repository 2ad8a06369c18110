pub mod datetime;
pub mod s3;
pub mod validation;
