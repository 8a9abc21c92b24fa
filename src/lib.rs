#![cfg_attr(not(test), no_std)]

//! tritail - Tricopter tail rotor control subsystem
//!
//! This library converts a commanded yaw torque into a tail servo position,
//! predicts the tilt-induced tail motor disturbance as a feed-forward throttle
//! correction, and provides the in-flight/on-ground "tail tune" calibration
//! facility.
//!
//! The crate is a synchronous, tick-driven core: the surrounding firmware
//! calls [`mixer::TailMixer::update`] once per control loop iteration and
//! queries [`mixer::TailMixer::motor_correction`] per motor. Hardware access
//! (clock, beeper, configuration persistence) is injected through the traits
//! in [`platform::traits`].

// Platform abstraction layer (injected capabilities and their mocks)
pub mod platform;

// Persisted configuration record
pub mod config;

// Reusable filter primitives
pub mod libraries;

// Yaw force curve, conversions, virtual actuator and the per-tick driver
pub mod mixer;

// Tail tune calibration state machine
pub mod tailtune;
