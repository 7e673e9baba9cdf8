// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

pub mod config;
pub mod fail;
pub mod logging;
pub mod memory;
