pub mod classification;

pub use classification::accuracy;
