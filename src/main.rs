fn main() {
    if let Err(err) = perf_harness_lib::run() {
        log::error!("Harness failed: {err:?}");
        std::process::exit(1);
    }
}
