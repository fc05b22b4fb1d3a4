pub mod api;
pub mod category_order;
pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod identity;
pub mod input;
pub mod reconcile;
pub mod render;
pub mod task;
pub mod view;
pub mod wire;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting ztd"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.ztdrc.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  if let Some(api_url) = cli.api {
    cfg.apply_overrides([(
      "api.url".to_string(),
      api_url
    )]);
  }

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let store =
    category_order::FileCategoryOrderStore::open(
      &data_dir
    )
    .with_context(|| {
      format!(
        "failed to open category \
         order store in {}",
        data_dir.display()
      )
    })?;

  let api = api::HttpTaskApi::new(
    &cfg.api_url(),
    cfg.api_timeout()?
  )?;
  let mut controller =
    controller::Controller::new(
      api,
      store,
      cfg.splice_policy()?
    );

  let mut renderer =
    render::Renderer::new(&cfg)?;
  let inv = cli::Invocation::parse(
    &cfg, cli.rest
  )?;

  if !matches!(
    inv.command.as_str(),
    "help" | "version"
  ) {
    controller.refresh().with_context(
      || {
        format!(
          "failed to load tasks from {}",
          controller.api().base_url()
        )
      }
    )?;
  }

  commands::dispatch(
    &mut controller,
    &cfg,
    &mut renderer,
    inv
  )?;

  info!("done");
  Ok(())
}
