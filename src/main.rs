use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    chatline::cli::main()
}
