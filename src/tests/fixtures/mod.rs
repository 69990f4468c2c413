pub mod envelopes;
