pub(crate) mod keepalive;
pub(crate) mod read;
pub(crate) mod write;
