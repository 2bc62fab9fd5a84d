mod class_dto;

pub use class_dto::{ClassFilter, ClassView, CreateClassParams, UpdateClassParams};
