mod config;
mod dispatcher;
mod router;
mod support;
