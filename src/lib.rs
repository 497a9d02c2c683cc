/*!
# EB Bills Dashboard

A browser-based viewer for an electricity-bill table hosted on a Supabase
REST endpoint, built in Rust.

## Overview

The application authenticates a user against a remote user table, pulls a
flat table of billing records over REST, and lets the user filter, paginate,
chart and export that data. The remote table is read-only from this
system's perspective; each process holds its own session map and dataset in
memory.

## Architecture

The application follows a client-server architecture:

### Frontend Layer
- **Technologies**: HTML, CSS, vanilla JavaScript
- **Key Components**:
  - Login form
  - Filter panel - bill month / ERO multi-select, free-text search
  - Paginated table with totals
  - Chart images (ERO bar chart, month-wise trend)
  - Export buttons (CSV, XLSX)

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Remote Data Client - authenticated REST fetch with retry/backoff
  - Row Normalizer - coerces raw records into a fixed column schema
  - Credential Checker - validates logins against the remote user table
  - Session Guard - 600 second inactivity window, checked per request
  - Filter/Aggregate/Paginate Pipeline - pure recompute per interaction
  - Exporter - CSV and single-sheet XLSX of the filtered view
  - Chart Renderer - server-side PNG generation

## Modules

- **config**: environment configuration (Supabase URL/key, table name)
- **error**: application error taxonomy and HTTP mapping
- **client**: Supabase REST client with retry and TLS error guidance
- **records**: `BillRecord` schema and the row normalizer
- **pipeline**: filters, pagination and aggregation
- **login**: credential checking and session management
- **downloader**: export functionality (CSV, XLSX)
- **graph**: chart generation from aggregated series
- **app**: routing, handlers and middleware

## REST API Endpoints

- `POST /login`, `GET /logout` - session management
- `POST /api/fetch` - pull and normalize the bill table
- `GET /api/view` - filtered/paginated view with totals and chart series
- `GET /api/export/csv`, `GET /api/export/xlsx` - download the filtered view
- `GET /api/chart/ero.png`, `GET /api/chart/month.png` - rendered charts
*/

// Re-export all modules so they appear in the documentation
pub mod app;
pub mod client;
pub mod config;
pub mod downloader;
pub mod error;
pub mod graph;
pub mod login;
pub mod pipeline;
pub mod records;

/// Re-export everything from these modules to make it easier to use
pub use client::*;
pub use config::*;
pub use downloader::*;
pub use error::*;
pub use login::*;
pub use pipeline::*;
pub use records::*;
