pub mod plurals;
