//! Kubernetes operator for stream-processing functions.
//!
//! Every `Function` resource (`kfn.io/v1alpha1`) is turned into a `ConfigMap` holding the
//! derived `function.properties` and a `Deployment` running the function invoker with that
//! file mounted. A digest of the properties is stamped on the pod template, so any change to
//! the effective configuration rolls the pods.

pub mod core;
pub mod http;
pub mod model;
pub mod policy;
pub mod service;
