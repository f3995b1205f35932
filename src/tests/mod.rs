//! End-to-end tests against the assembled router, with wiremock standing in
//! for the remote backends.

mod federation_e2e;
