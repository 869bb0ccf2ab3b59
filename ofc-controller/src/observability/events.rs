/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

// Controller
pub const CONTROLLER_SWITCH_CREATED: &str = "controller_switch_created";
pub const CONTROLLER_SWITCH_EXISTS: &str = "controller_switch_exists";
pub const CONTROLLER_SWITCH_REMOVED: &str = "controller_switch_removed";
pub const CONTROLLER_SWITCH_REMOVE_MISSING: &str = "controller_switch_remove_missing";
pub const CONTROLLER_LISTENER_STARTED: &str = "controller_listener_started";
pub const CONTROLLER_LISTENER_START_FAILED: &str = "controller_listener_start_failed";
pub const CONTROLLER_EVENT_UNROUTED: &str = "controller_event_unrouted";
pub const CONTROLLER_LOOP_STOPPED: &str = "controller_loop_stopped";

// Listener
pub const LISTENER_ACCEPT: &str = "listener_accept";
pub const LISTENER_ACCEPT_FAILED: &str = "listener_accept_failed";
pub const LISTENER_ACCEPT_LOOP_STOPPED: &str = "listener_accept_loop_stopped";
pub const LISTENER_TLS_HANDSHAKE_FAILED: &str = "listener_tls_handshake_failed";
pub const LISTENER_FEATURES_REQUESTED: &str = "listener_features_requested";
pub const LISTENER_FEATURES_XID_MISMATCH: &str = "listener_features_xid_mismatch";
pub const LISTENER_SESSION_PAIRED: &str = "listener_session_paired";
pub const LISTENER_UNEXPECTED_MESSAGE: &str = "listener_unexpected_message";
pub const LISTENER_HANDOFF: &str = "listener_handoff";
pub const LISTENER_HANDOFF_UNCLAIMED: &str = "listener_handoff_unclaimed";
pub const LISTENER_SESSION_CLOSED: &str = "listener_session_closed";
pub const LISTENER_FRAME_ERROR: &str = "listener_frame_error";

// Session and connection I/O
pub const SESSION_ECHO: &str = "session_echo";
pub const SESSION_SEND_FAILED: &str = "session_send_failed";
pub const SESSION_CLOSED: &str = "session_closed";
pub const CONNECTION_READ_FAILED: &str = "connection_read_failed";
pub const CONNECTION_WRITE_FAILED: &str = "connection_write_failed";
pub const CONNECTION_UNWIRED_RELEASED: &str = "connection_unwired_released";

// Switch
pub const SWITCH_CREATED: &str = "switch_created";
pub const SWITCH_SESSION_ADOPTED: &str = "switch_session_adopted";
pub const SWITCH_SESSION_DISPLACED: &str = "switch_session_displaced";
pub const SWITCH_HANDOFF_FAILED: &str = "switch_handoff_failed";
pub const SWITCH_MESSAGE_LOGGED: &str = "switch_message_logged";
pub const SWITCH_PACKET_IN: &str = "switch_packet_in";
pub const SWITCH_FLOW_REMOVED: &str = "switch_flow_removed";
pub const SWITCH_PORT_STATUS: &str = "switch_port_status";
pub const SWITCH_COMMAND_SENT: &str = "switch_command_sent";
pub const SWITCH_COMMAND_FAILED: &str = "switch_command_failed";
pub const SWITCH_FLOW_CONTROL: &str = "switch_flow_control";
pub const SWITCH_FRAME_ERROR: &str = "switch_frame_error";
pub const SWITCH_SESSION_CLOSED: &str = "switch_session_closed";
pub const SWITCH_REMOVE_REQUESTED: &str = "switch_remove_requested";

// Packet decoder
pub const PACKET_DECODE_GAP: &str = "packet_decode_gap";
