// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

use log::LevelFilter;

const LOG_TAG: &str = "hevtunnel_jni";

pub(crate) fn init_logs(level: &str) {
    use android_logger::{Config, FilterBuilder};
    let levels = format!("{level},hevtun_core=debug,hevtunnel_jni=debug");

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Trace)
            .with_tag(LOG_TAG)
            .with_filter(FilterBuilder::new().parse(levels.as_str()).build()),
    );
    log::debug!("Logger initialized");
}
