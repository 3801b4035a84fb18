pub mod layers;

pub use layers::BatchNormalizationBuilder;
