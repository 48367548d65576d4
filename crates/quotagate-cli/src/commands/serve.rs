//! Serve command

use anyhow::Result;
use quotagate_core::gateway;

use crate::output::print_info;
use super::Context;

pub async fn execute(ctx: &Context, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| ctx.config.bind.clone());
    let state = gateway::build_state(&ctx.config, &ctx.db).await?;

    print_info(
        &format!(
            "Serving {} provider(s) on http://{}",
            state.dispatcher.registry().len(),
            bind
        ),
        ctx.quiet,
    );

    gateway::serve(state, &bind).await
}
