pub mod reminder;
