/***************************************/
/*               Macros                */
/***************************************/

/// Unwraps a `Result`, or logs the error with its context and terminates the
/// process. Reserved for configuration, socket setup and transport failures.
#[macro_export]
macro_rules! unwrap_or_exit {
    ($expr:expr, $context:expr) => {
        match $expr {
            Ok(val) => val,
            Err(e) => {
                log::error!("{}: {}", $context, e);
                std::process::exit(1);
            }
        }
    };
}
