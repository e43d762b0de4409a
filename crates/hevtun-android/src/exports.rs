// Copyright 2024 - Nym Technologies SA <contact@nymtech.net>
// SPDX-License-Identifier: GPL-3.0-only

//! Native methods of `vpn.vray.itopvpn.service.MyVpnService`.

use std::ffi::c_void;

use jni::{
    objects::{JClass, JString},
    sys::{jboolean, jint, JNI_FALSE, JNI_TRUE, JNI_VERSION_1_6},
    JNIEnv, JavaVM,
};

use crate::{bridge, logging};

#[no_mangle]
pub extern "system" fn JNI_OnLoad(_vm: JavaVM, _reserved: *mut c_void) -> jint {
    logging::init_logs("info");
    JNI_VERSION_1_6
}

#[no_mangle]
pub extern "system" fn Java_vpn_vray_itopvpn_service_MyVpnService_nativeStartTunnel(
    mut env: JNIEnv,
    _class: JClass,
    config_yaml: JString,
    tun_fd: jint,
) -> jint {
    // A null or unreadable string starts the tunnel with an empty config.
    let config: String = if config_yaml.is_null() {
        String::new()
    } else {
        match env.get_string(&config_yaml) {
            Ok(config) => config.into(),
            Err(err) => {
                tracing::error!("Failed to read tunnel config: {}", err);
                String::new()
            }
        }
    };
    bridge::start_tunnel(&config, tun_fd)
}

#[no_mangle]
pub extern "system" fn Java_vpn_vray_itopvpn_service_MyVpnService_nativeStopTunnel(
    _env: JNIEnv,
    _class: JClass,
) {
    bridge::stop_tunnel()
}

#[no_mangle]
pub extern "system" fn Java_vpn_vray_itopvpn_service_MyVpnService_nativeIsRunning(
    _env: JNIEnv,
    _class: JClass,
) -> jboolean {
    if bridge::is_running() {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

#[no_mangle]
pub extern "system" fn Java_vpn_vray_itopvpn_service_MyVpnService_nativeCloseFd(
    _env: JNIEnv,
    _class: JClass,
    fd: jint,
) {
    bridge::close_fd(fd)
}
