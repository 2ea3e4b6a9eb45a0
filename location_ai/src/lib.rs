//! SPDX-License-Identifier: GPL-3.0-or-later

pub mod decision;
pub mod geodesy;
pub mod history;
pub mod trend;
