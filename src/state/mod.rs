pub mod clipboard;
pub mod columns;
pub mod crud;
pub mod data_model;
pub mod grid_state;
pub mod selection;
pub mod transactions;
