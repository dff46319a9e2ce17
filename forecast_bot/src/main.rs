use bot_commons::*;

fn main() {
    if std::env::var_os("RUST_LOG").is_none() {
        // Nothing else runs yet, so nothing else reads the environment.
        unsafe { std::env::set_var("RUST_LOG", "WARN,forecast_bot=debug") };
    }
    start_everything(forecast_bot::entry());
}
