pub mod tsi1;
