//! Callback registry a `Session` dispatches into (spec.md §4.8). Mirrors
//! `messaging_client.h`'s `set_connection_notification` /
//! `set_message_notification` / `set_file_notification` /
//! `set_binary_notification` quartet.

use meshwire_proto::Container;

type ConnectionCb = dyn Fn(&str, &str, bool) + Send + Sync;
type MessageCb = dyn Fn(Container) + Send + Sync;
type FileCb = dyn Fn(&str, &str, &str, &str, &str, Vec<u8>) + Send + Sync;
type BinaryCb = dyn Fn(&str, &str, &str, &str, Vec<u8>) + Send + Sync;

#[derive(Default)]
pub struct Callbacks {
    connection: Option<Box<ConnectionCb>>,
    message: Option<Box<MessageCb>>,
    file: Option<Box<FileCb>>,
    binary: Option<Box<BinaryCb>>,
}

impl Callbacks {
    pub fn set_connection<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, bool) + Send + Sync + 'static,
    {
        self.connection = Some(Box::new(f));
    }

    pub fn set_message<F>(&mut self, f: F)
    where
        F: Fn(Container) + Send + Sync + 'static,
    {
        self.message = Some(Box::new(f));
    }

    pub fn set_file<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, &str, &str, &str, Vec<u8>) + Send + Sync + 'static,
    {
        self.file = Some(Box::new(f));
    }

    pub fn set_binary<F>(&mut self, f: F)
    where
        F: Fn(&str, &str, &str, &str, Vec<u8>) + Send + Sync + 'static,
    {
        self.binary = Some(Box::new(f));
    }

    pub fn fire_connection(&self, peer_id: &str, peer_sub_id: &str, connected: bool) {
        if let Some(cb) = &self.connection {
            cb(peer_id, peer_sub_id, connected);
        }
    }

    pub fn fire_message(&self, container: Container) {
        if let Some(cb) = &self.message {
            cb(container);
        }
    }

    pub fn fire_file(
        &self,
        source_id: &str,
        source_sub_id: &str,
        target_id: &str,
        target_sub_id: &str,
        path: &str,
        content: Vec<u8>,
    ) {
        if let Some(cb) = &self.file {
            cb(source_id, source_sub_id, target_id, target_sub_id, path, content);
        }
    }

    pub fn fire_binary(&self, source_id: &str, source_sub_id: &str, target_id: &str, target_sub_id: &str, data: Vec<u8>) {
        if let Some(cb) = &self.binary {
            cb(source_id, source_sub_id, target_id, target_sub_id, data);
        }
    }
}
