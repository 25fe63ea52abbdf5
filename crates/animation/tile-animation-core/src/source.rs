//! Layer sources and per-frame configuration.
//!
//! A [`LayerSource`] describes where tiles come from (a WMS or WMTS
//! service). [`specialize`] turns it into an immutable [`FrameConfig`] for
//! one instant, resolving time-ranged overrides at that moment.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::config::{AnimationConfig, DEFAULT_GRID_BUFFER};
use crate::error::AnimationError;
use crate::time::Timestamp;

const DEFAULT_FORMAT: &str = "image/png";

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSource {
    Wms(WmsSource),
    Wmts(WmtsSource),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WmsSource {
    pub url: String,
    #[serde(default)]
    pub name: Option<String>,
    pub params: WmsParams,
    #[serde(default)]
    pub options: WmsOptions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WmsParams {
    /// Comma separated layer ids.
    pub layers: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_true")]
    pub transparent: bool,
    /// Vendor parameters passed through untouched.
    #[serde(default, flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WmsOptions {
    #[serde(default, alias = "singleTile")]
    pub single_tile: bool,
    #[serde(default)]
    pub buffer: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WmtsSource {
    pub url: String,
    pub layer: String,
    #[serde(alias = "matrixSet")]
    pub matrix_set: String,
    pub style: String,
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub buffer: Option<u32>,
}

impl LayerSource {
    pub fn wms(url: impl Into<String>, layers: impl Into<String>) -> Result<Self, AnimationError> {
        let source = Self::Wms(WmsSource {
            url: url.into(),
            name: None,
            params: WmsParams {
                layers: layers.into(),
                format: default_format(),
                transparent: true,
                extra: HashMap::new(),
            },
            options: WmsOptions::default(),
        });
        source.validate()?;
        Ok(source)
    }

    pub fn wmts(
        url: impl Into<String>,
        layer: impl Into<String>,
        matrix_set: impl Into<String>,
        style: impl Into<String>,
    ) -> Result<Self, AnimationError> {
        let source = Self::Wmts(WmtsSource {
            url: url.into(),
            layer: layer.into(),
            matrix_set: matrix_set.into(),
            style: style.into(),
            format: default_format(),
            name: None,
            buffer: None,
        });
        source.validate()?;
        Ok(source)
    }

    pub fn from_json(text: &str) -> Result<Self, AnimationError> {
        let source: Self = serde_json::from_str(text)?;
        source.validate()?;
        Ok(source)
    }

    /// Mandatory fields: WMS needs url and layers, WMTS needs url, layer,
    /// matrix set and style.
    pub fn validate(&self) -> Result<(), AnimationError> {
        fn require(value: &str, what: &str) -> Result<(), AnimationError> {
            if value.trim().is_empty() {
                Err(AnimationError::invalid_config(format!("{what} is required")))
            } else {
                Ok(())
            }
        }
        match self {
            Self::Wms(wms) => {
                require(&wms.url, "WMS url")?;
                require(&wms.params.layers, "WMS layers")
            }
            Self::Wmts(wmts) => {
                require(&wmts.url, "WMTS url")?;
                require(&wmts.layer, "WMTS layer")?;
                require(&wmts.matrix_set, "WMTS matrix set")?;
                require(&wmts.style, "WMTS style")
            }
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.set_name(name.into());
        self
    }

    #[inline]
    pub fn url(&self) -> &str {
        match self {
            Self::Wms(wms) => &wms.url,
            Self::Wmts(wmts) => &wmts.url,
        }
    }

    #[inline]
    pub fn layer(&self) -> &str {
        match self {
            Self::Wms(wms) => &wms.params.layers,
            Self::Wmts(wmts) => &wmts.layer,
        }
    }

    fn set_layer(&mut self, layer: &str) {
        match self {
            Self::Wms(wms) => wms.params.layers = layer.to_string(),
            Self::Wmts(wmts) => wmts.layer = layer.to_string(),
        }
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Wms(wms) => wms.name.as_deref(),
            Self::Wmts(wmts) => wmts.name.as_deref(),
        }
    }

    fn set_name(&mut self, name: String) {
        match self {
            Self::Wms(wms) => wms.name = Some(name),
            Self::Wmts(wmts) => wmts.name = Some(name),
        }
    }

    #[inline]
    pub fn buffer(&self) -> Option<u32> {
        match self {
            Self::Wms(wms) => wms.options.buffer,
            Self::Wmts(wmts) => wmts.buffer,
        }
    }

    fn set_buffer(&mut self, buffer: u32) {
        match self {
            Self::Wms(wms) => wms.options.buffer = Some(buffer),
            Self::Wmts(wmts) => wmts.buffer = Some(buffer),
        }
    }
}

/// Everything the renderer needs to create the layer for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameConfig {
    pub time: Timestamp,
    /// ISO-8601 value of the `TIME` request parameter.
    pub time_param: String,
    pub layer: String,
    pub name: Option<String>,
    pub has_legend: bool,
    pub buffer: u32,
    pub z_index: Option<i32>,
    /// The base source with layer id, name and buffer resolved for this frame.
    pub source: LayerSource,
}

/// Produce the configuration of the frame at `time`.
///
/// Overrides are resolved here, once, so a frame's configuration never
/// changes after the sequence is built.
pub fn specialize(
    source: &LayerSource,
    config: &AnimationConfig,
    time: Timestamp,
    z_index: Option<i32>,
) -> FrameConfig {
    let mut resolved = source.clone();
    let layer_override = config.layer_override(time);

    if let Some(layer) = layer_override
        .and_then(|o| o.layer.as_deref())
        .filter(|layer| !layer.is_empty())
    {
        resolved.set_layer(layer);
    }

    let name = layer_override
        .and_then(|o| o.name.clone())
        .or_else(|| config.name.clone())
        .or_else(|| source.name().map(str::to_string));
    if let Some(name) = name.clone().filter(|n| !n.is_empty()) {
        resolved.set_name(name);
    }

    let has_legend = layer_override
        .and_then(|o| o.has_legend)
        .or(config.has_legend)
        .unwrap_or(false);

    let buffer = source.buffer().unwrap_or(DEFAULT_GRID_BUFFER);
    resolved.set_buffer(buffer);

    FrameConfig {
        time,
        time_param: time.to_iso_string(),
        layer: resolved.layer().to_string(),
        name,
        has_legend,
        buffer,
        z_index,
        source: resolved,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayerOverride;
    use crate::time::TimeInput;

    #[test]
    fn constructors_reject_missing_fields() {
        assert!(LayerSource::wms("http://wms", "radar").is_ok());
        assert!(matches!(
            LayerSource::wms("", "radar"),
            Err(AnimationError::InvalidConfig { .. })
        ));
        assert!(LayerSource::wms("http://wms", " ").is_err());
        assert!(LayerSource::wmts("http://wmts", "radar", "EPSG:3857", "default").is_ok());
        assert!(LayerSource::wmts("http://wmts", "radar", "", "default").is_err());
    }

    #[test]
    fn wms_json_keeps_vendor_params() {
        let source = LayerSource::from_json(
            r#"{"kind":"wms","url":"http://wms","params":{"layers":"radar","styles":"rain"}}"#,
        )
        .unwrap();
        let LayerSource::Wms(wms) = &source else {
            panic!("expected wms");
        };
        assert_eq!(wms.params.format, "image/png");
        assert!(wms.params.transparent);
        assert_eq!(wms.params.extra.get("styles"), Some(&serde_json::json!("rain")));
    }

    #[test]
    fn specialize_resolves_time_and_defaults() {
        let source = LayerSource::wms("http://wms", "radar").unwrap();
        let config = AnimationConfig {
            name: Some("Radar".into()),
            ..Default::default()
        };
        let frame = specialize(&source, &config, Timestamp::from_millis(1_362_139_200_000), Some(5));
        assert_eq!(frame.time_param, "2013-03-01T12:00:00.000Z");
        assert_eq!(frame.layer, "radar");
        assert_eq!(frame.name.as_deref(), Some("Radar"));
        assert_eq!(frame.buffer, DEFAULT_GRID_BUFFER);
        assert_eq!(frame.source.buffer(), Some(DEFAULT_GRID_BUFFER));
        assert_eq!(frame.z_index, Some(5));
        assert!(!frame.has_legend);
        // the base source is untouched
        assert_eq!(source.buffer(), None);
    }

    #[test]
    fn specialize_applies_overrides_for_matching_time_only() {
        let source = LayerSource::wmts("http://wmts", "base", "grid", "default").unwrap();
        let config = AnimationConfig {
            has_legend: Some(false),
            layers: vec![LayerOverride {
                begin_time: TimeInput::from(1000i64),
                end_time: None,
                layer: Some("forecast".into()),
                name: Some("Forecast".into()),
                has_legend: Some(true),
            }],
            ..Default::default()
        };
        let before = specialize(&source, &config, Timestamp::from_millis(0), None);
        assert_eq!(before.layer, "base");
        assert_eq!(before.name, None);
        let after = specialize(&source, &config, Timestamp::from_millis(1000), None);
        assert_eq!(after.layer, "forecast");
        assert_eq!(after.source.layer(), "forecast");
        assert_eq!(after.source.name(), Some("Forecast"));
        assert!(after.has_legend);
    }
}
