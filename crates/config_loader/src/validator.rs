//! 配置校验模块
//!
//! 校验规则：
//! - 字段范围 (由 `validator` derive 声明在 contracts 中)
//! - 相机分辨率必须为 200x88 (数据格式固定)
//! - 起点与终点 spawn 索引不同
//! - auto.min_distance_m <= auto.max_distance_m
//! - 指令映射目标必须是已知指令

use std::borrow::Cow;

use contracts::{CollectorBlueprint, ContractError, IMAGE_HEIGHT, IMAGE_WIDTH};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

/// 校验 CollectorBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    validate_field_ranges(blueprint)?;
    validate_camera(blueprint)?;
    validate_route_indices(blueprint)?;
    validate_auto_distances(blueprint)?;
    validate_command_mapping(blueprint)?;
    Ok(())
}

/// 字段级约束
fn validate_field_ranges(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    match blueprint.validate() {
        Ok(()) => Ok(()),
        Err(errors) => {
            let (field, message) = first_violation(&errors, "")
                .unwrap_or_else(|| (String::from("<root>"), errors.to_string()));
            Err(ContractError::config_validation(field, message))
        }
    }
}

/// Depth-first, alphabetically ordered, so the reported field is stable.
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (field, kind) in entries {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                if let Some(err) = list.first() {
                    let message = err
                        .message
                        .clone()
                        .unwrap_or_else(|| Cow::Owned(format!("failed '{}' check", err.code)));
                    return Some((path, message.into_owned()));
                }
            }
            ValidationErrorsKind::Struct(inner) => {
                if let Some(found) = first_violation(inner, &path) {
                    return Some(found);
                }
            }
            ValidationErrorsKind::List(items) => {
                for (idx, inner) in items {
                    if let Some(found) = first_violation(inner, &format!("{path}[{idx}]")) {
                        return Some(found);
                    }
                }
            }
        }
    }
    None
}

/// 相机分辨率
fn validate_camera(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let camera = &blueprint.camera;
    if camera.width as usize != IMAGE_WIDTH || camera.height as usize != IMAGE_HEIGHT {
        return Err(ContractError::config_validation(
            "camera.width / camera.height",
            format!(
                "samples are stored as {IMAGE_WIDTH}x{IMAGE_HEIGHT}, got {}x{}",
                camera.width, camera.height
            ),
        ));
    }
    Ok(())
}

/// 起终点索引
fn validate_route_indices(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let vehicle = &blueprint.vehicle;
    if vehicle.spawn_index == vehicle.destination_index {
        return Err(ContractError::config_validation(
            "vehicle.destination_index",
            format!(
                "destination_index must differ from spawn_index ({})",
                vehicle.spawn_index
            ),
        ));
    }
    Ok(())
}

/// 全自动路线距离范围
fn validate_auto_distances(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    let auto = &blueprint.auto;
    if auto.min_distance_m > auto.max_distance_m {
        return Err(ContractError::config_validation(
            "auto.min_distance_m / auto.max_distance_m",
            format!(
                "min_distance_m ({}) must be <= max_distance_m ({})",
                auto.min_distance_m, auto.max_distance_m
            ),
        ));
    }
    Ok(())
}

/// 指令映射
fn validate_command_mapping(blueprint: &CollectorBlueprint) -> Result<(), ContractError> {
    for (name, command) in blueprint.commands.entries() {
        if !command.is_known() {
            return Err(ContractError::config_validation(
                format!("commands.{name}"),
                format!("mapping target {command} is not a navigation command"),
            ));
        }
    }
    Ok(())
}
