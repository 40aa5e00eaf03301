pub mod list;
pub mod normalize;
pub mod rating;
pub mod select;
pub mod tags;
