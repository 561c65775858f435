/// Declare a task parameter struct with a positional constructor.
///
/// # Examples
/// ```rust
/// use stack_pool::sp_task_params;
///
/// sp_task_params! {
///     Accumulate {
///         iterations: usize,
///         result: *mut u64,
///     }
/// }
///
/// let mut result = 0u64;
/// let params = Accumulate::new(1000, &mut result);
/// ```
#[macro_export]
macro_rules! sp_task_params {
    ($struct_name:ident { $($field:ident: $field_type:ty),* $(,)? }) => {
        pub struct $struct_name {
            $(pub $field: $field_type,)*
        }

        impl $struct_name {
            pub fn new($($field: $field_type),*) -> Self {
                Self {
                    $($field,)*
                }
            }
        }
    };
}

/// Define a task callback with the pool's `(data, context)` signature,
/// dereferencing the context pointer to the given parameter type.
///
/// # Examples
/// ```rust
/// use stack_pool::{sp_define_task_fn, sp_task_params, sp_write};
///
/// sp_task_params! {
///     Accumulate {
///         iterations: usize,
///         result: *mut u64,
///     }
/// }
///
/// sp_define_task_fn!(accumulate_task, Accumulate, |data, params| {
///     let mut sum = data;
///     for i in 0..params.iterations {
///         sum = sum.wrapping_add(i as u64);
///     }
///     sp_write!(params.result, sum);
/// });
/// ```
#[macro_export]
macro_rules! sp_define_task_fn {
    ($fn_name:ident, $param_type:ty, |$data:ident, $params:ident| $body:block) => {
        fn $fn_name($data: u64, raw_context: $crate::TaskContextPointer) {
            let $params = unsafe { &*(raw_context as *const $param_type) };
            $body
        }
    };
}

/// Write a result through a raw pointer without an explicit unsafe block at
/// the call site.
///
/// # Examples
/// ```rust
/// use stack_pool::{sp_define_task_fn, sp_task_params, sp_write};
///
/// sp_task_params! {
///     Doubler { value: u64, result: *mut u64 }
/// }
///
/// sp_define_task_fn!(double_task, Doubler, |_data, params| {
///     sp_write!(params.result, params.value * 2);
/// });
/// ```
#[macro_export]
macro_rules! sp_write {
    ($result_ptr:expr, $value:expr) => {
        unsafe {
            *$result_ptr = $value;
        }
    };
}
