pub mod attributes;
pub mod dispatcher;
pub mod encoding;
pub mod payload;
pub mod request;
pub mod sender;
pub mod translator;
