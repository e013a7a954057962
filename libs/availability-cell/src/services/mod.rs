pub mod resolver;
pub mod slots;
pub mod template;
