/// A macro to create a new `BatchNormalization` layer.
///
/// # Examples
///
/// ```
/// use batchnorm::batch_norm;
/// let layer = batch_norm!([10, 10], mode = 1, epsilon = 0.1).unwrap();
/// assert_eq!(layer.features(), 10);
/// assert_eq!(layer.epsilon(), 0.1);
/// ```
///
/// This builds a running-average layer for inputs whose trailing axis has 10
/// features. Every `key = value` pair calls the builder method of that name,
/// so `momentum`, `gamma_init`, `beta_init` and `weights` work the same way.
#[macro_export]
macro_rules! batch_norm {
    ([$($dim:expr),+ $(,)?] $(, $key:ident = $value:expr)* $(,)?) => {
        $crate::builders::BatchNormalizationBuilder::new()
            .input_shape(&[$($dim),+])
            $(.$key($value))*
            .build()
    };
}
