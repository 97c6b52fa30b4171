mod kit;
mod local_store;
