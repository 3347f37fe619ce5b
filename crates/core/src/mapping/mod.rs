use serde::{Deserialize, Serialize};

use crate::Notification;

/// Describes how a MIDI controller should be routed to a render parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingDescriptor {
    pub controller: u8,
    pub target: String,
    /// Parameter value for a controller value of 0.
    #[serde(default)]
    pub min: f32,
    /// Parameter value for a controller value of 127.
    #[serde(default = "default_max")]
    pub max: f32,
}

fn default_max() -> f32 {
    1.0
}

impl MappingDescriptor {
    pub fn new(controller: u8, target: impl Into<String>) -> Self {
        Self {
            controller,
            target: target.into(),
            min: 0.0,
            max: default_max(),
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn scale(&self, value_norm: f32) -> f32 {
        self.min + (self.max - self.min) * value_norm.clamp(0.0, 1.0)
    }
}

/// Runtime mapping matrix collecting [`ParameterUpdate`] values as control
/// changes arrive.
#[derive(Debug, Default, Clone)]
pub struct MappingMatrix {
    mappings: Vec<MappingDescriptor>,
    updates: Vec<ParameterUpdate>,
}

impl MappingMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mappings(mappings: Vec<MappingDescriptor>) -> Self {
        Self {
            mappings,
            updates: Vec::new(),
        }
    }

    pub fn add(&mut self, mapping: MappingDescriptor) {
        self.mappings.push(mapping);
    }

    pub fn mappings(&self) -> &[MappingDescriptor] {
        &self.mappings
    }

    pub fn updates(&self) -> &[ParameterUpdate] {
        &self.updates
    }

    pub fn take_updates(&mut self) -> Vec<ParameterUpdate> {
        std::mem::take(&mut self.updates)
    }

    /// Records an update for every mapping bound to the notification's
    /// controller. Anything but a control change is ignored.
    pub fn apply(&mut self, notification: &Notification) {
        let Notification::ControlChange {
            controller,
            value_norm,
        } = *notification
        else {
            return;
        };

        for mapping in self.mappings.iter().filter(|m| m.controller == controller) {
            self.updates.push(ParameterUpdate {
                target: mapping.target.clone(),
                value: mapping.scale(value_norm),
            });
        }
    }
}

/// Concrete value routed to a render or scene parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUpdate {
    pub target: String,
    pub value: f32,
}
