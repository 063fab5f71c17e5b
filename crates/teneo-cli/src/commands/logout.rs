use super::{CliResult, Context};

pub fn run(ctx: &Context) -> CliResult {
    let config = ctx.load_config()?;
    let store = ctx.store()?;
    ctx.bootstrap(&config, store).logout()?;
    println!("logged out");
    Ok(())
}
