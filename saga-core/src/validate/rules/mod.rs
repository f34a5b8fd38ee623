pub(crate) mod saga;
pub(crate) mod step;
