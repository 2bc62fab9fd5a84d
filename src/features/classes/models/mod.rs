mod class;

pub use class::{path_is_rooted_under, root_path, Class, ClassLocale, ClassStatus};
