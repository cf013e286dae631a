/*!
# Condominium Water-Meter Dashboard

A dashboard for building managers: pick a condominium, import a spreadsheet of
water-meter readings, fix readings inline and send them to the remote report
service, which renders the billing reports and returns download links.

## Overview

All tariff math and PDF/ZIP generation happen in the report service. This crate
owns the pipeline in front of it: spreadsheet import, the editable table of
readings, form gating, and the two report requests (preview and process).

## Architecture

### Import pipeline
- **loader**: reads the first sheet of an `.xlsx` upload into raw records keyed by header
- **reading**: normalizes one raw record into a `Reading` (never fails, garbage becomes 0)
- **store**: ordered readings, edited in place by row position

### Submission
- **form**: billing fields and the `can_submit` gate
- **client**: payload building and the HTTP calls to the report service
- **preview**: latest preview documents, addressed as `global` or `individual-N`

### Orchestration
- **dashboard**: the session context, its action dispatcher, busy lock and UI events
- **config**: environment settings and logging setup
- **app**: axum JSON API over the dashboard (feature `web`)

## Spreadsheet format

The header row is matched case- and whitespace-insensitively against
`unidade`, `leitura_anterior`, `leitura_atual` and `area_comum`; other
columns are ignored. `area_comum` is true for `true`, `sim`, `1`, `s` or
`verdadeiro`.

## REST API Endpoints

- `GET /api/condominiums`, `POST /api/condominiums/select`, `POST /api/back`
- `POST /api/import`, `POST /api/logo`, `DELETE /api/logo`
- `POST /api/cell`, `POST /api/common-area`, `POST /api/fields`
- `POST /api/preview`, `GET /api/preview/{selector}`, `POST /api/process`
- `GET /api/state`
*/

#[cfg(feature = "web")]
pub mod app;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod form;
pub mod loader;
pub mod preview;
pub mod reading;
pub mod store;

/// Re-export everything from these modules to make it easier to use
pub use client::*;
pub use config::*;
pub use dashboard::*;
pub use error::*;
pub use form::*;
pub use preview::*;
pub use reading::*;
pub use store::*;
