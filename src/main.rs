use dflowmap::driver;
use dflowmap_utils::DflowResult;

fn main() -> DflowResult<()> {
    driver::run_compiler()
}
