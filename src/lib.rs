/*!
# SYNAPSE

Backend for a micro-learning site built from short technical flashcards
("Bits"), long-form tutorials, topic pages and guided tracks, with a little
gamification on top.

## Overview

Content is a static catalog compiled into the binary (or loaded from
`CATALOG_PATH`). Visitors browse it through a JSON API; signed-in learners
also earn XP, keep a daily streak, unlock badges and save bookmarks. Two
endpoints forward to a generative-AI provider to draft new Bits and to
answer questions in a chat window.

## Architecture

### Content Layer
- **content**: Bit, Tutorial and Project schema, the catalog and its lookups
- **topics**: Topic registry and the tag rules that sort Bits into topics
- **tracks**: Curated learning paths and tracks derived from topics
- **feed**: Search, tabs, pagination and tag categories for list views

### Learner Layer
- **progress**: XP, levels, streaks, badges, bookmarks and recommendations
- **login**: Registration, Argon2 password hashing and cookie sessions
- **notifier**: Completion webhook for a chat bot

### Service Layer
- **app**: Router, shared state and handlers
- **proxy** / **llm**: Generative-AI endpoints and the provider client
- **ratelimit**: Fixed-window limiting per client address
- **config**: Environment configuration
- **error**: The `AppError` type every handler returns

### Data Persistence Layer
- JSON documents under `DATABASE_DIR`, replaced atomically on write
- Gzip-compressed JSON export and import of a learner's progress

## REST API Endpoints

- `/api/bits?q=&tab=&page=` - Paginated feed
- `/api/bits/{slug}` - Bit detail (403 for locked content)
- `/api/topics`, `/api/topics/{slug}` - Topic listing and topic page
- `/api/tracks`, `/api/tracks/{slug}` - Learning tracks
- `/api/progress/...` - Dashboard, awards, export and import
- `/api/auth/...` - Sign up, login, logout, profile
- `/api/generate-bit`, `/api/chat` - Generative-AI proxy
*/

pub mod app;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod llm;
pub mod login;
pub mod notifier;
pub mod progress;
pub mod proxy;
pub mod ratelimit;
pub mod saving;
pub mod topics;
pub mod tracks;
pub mod utils;

/// Re-export the types most callers need
pub use app::{AppState, router, run};
pub use config::Config;
pub use content::{Bit, Catalog, Tutorial};
pub use error::AppError;
pub use progress::Progress;
