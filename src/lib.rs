pub mod shared {
    pub mod core {
        pub mod primitives;
    }
    pub mod infrastructure {
        pub mod change_notifier;
        pub mod durable_store;
    }
}

pub mod modules {
    pub mod event_streams {
        pub mod core {
            pub mod concurrency_guard;
            pub mod errors;
            pub mod stream_registry;
        }
        pub mod use_cases {
            pub mod append_to_stream {
                pub mod handler;
            }
            pub mod create_stream_and_append {
                pub mod command;
                pub mod handler;
            }
            pub mod hydrate_stream {
                pub mod handler;
            }
        }
    }
}

pub mod shell;
