pub mod fact;
pub mod fuzzy;
pub mod keys;
pub mod kind;
pub mod mention;
pub mod resolution;
pub mod salience;
