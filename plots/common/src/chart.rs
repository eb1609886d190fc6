use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLUE: Rgb = Rgb(0x1f, 0x77, 0xb4);
    pub const ORANGE: Rgb = Rgb(0xff, 0x7f, 0x0e);
    pub const GREEN: Rgb = Rgb(0x2c, 0xa0, 0x2c);
    pub const RED: Rgb = Rgb(0xd6, 0x27, 0x28);
    pub const PURPLE: Rgb = Rgb(0x94, 0x67, 0xbd);
    pub const MUTED_BLUE: Rgb = Rgb(0x4c, 0x72, 0xb0);
    pub const MUTED_GREEN: Rgb = Rgb(0x55, 0xa8, 0x68);
    pub const MUTED_RED: Rgb = Rgb(0xc4, 0x4e, 0x52);
    pub const MUTED_PURPLE: Rgb = Rgb(0x81, 0x72, 0xb2);

    const CYCLE: [Rgb; 10] = [
        Rgb::BLUE,
        Rgb::ORANGE,
        Rgb::GREEN,
        Rgb::RED,
        Rgb::PURPLE,
        Rgb(0x8c, 0x56, 0x4b),
        Rgb(0xe3, 0x77, 0xc2),
        Rgb(0x7f, 0x7f, 0x7f),
        Rgb(0xbc, 0xbd, 0x22),
        Rgb(0x17, 0xbe, 0xcf),
    ];

    /// Color of the `idx`th series when none is given
    pub fn cycle(idx: usize) -> Rgb {
        Self::CYCLE[idx % Self::CYCLE.len()]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scale {
    Linear,
    Log10,
    Log2,
}

impl Scale {
    pub fn base(&self) -> f64 {
        match self {
            Scale::Linear => 1.0,
            Scale::Log10 => 10.0,
            Scale::Log2 => 2.0,
        }
    }

    /// Whether `value` can be placed on an axis of this scale
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite() && (*self == Scale::Linear || value > 0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub label: String,
    pub scale: Scale,
}

impl Axis {
    pub fn linear(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scale: Scale::Linear,
        }
    }

    pub fn log10(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scale: Scale::Log10,
        }
    }

    pub fn log2(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            scale: Scale::Log2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Circle,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStyle {
    Line(Option<Marker>),
    Scatter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: Option<String>,
    pub color: Rgb,
    pub style: SeriesStyle,
    pub points: Vec<(f64, f64)>,
    /// Text drawn next to each point, same order as `points`
    pub point_labels: Vec<String>,
}

impl Series {
    pub fn line(points: Vec<(f64, f64)>, color: Rgb) -> Self {
        Self {
            label: None,
            color,
            style: SeriesStyle::Line(Some(Marker::Circle)),
            points,
            point_labels: Vec::new(),
        }
    }

    pub fn scatter(points: Vec<(f64, f64)>, color: Rgb) -> Self {
        Self {
            style: SeriesStyle::Scatter,
            ..Self::line(points, color)
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_marker(mut self, marker: Option<Marker>) -> Self {
        self.style = SeriesStyle::Line(marker);
        self
    }

    pub fn with_point_labels(mut self, labels: Vec<String>) -> Self {
        self.point_labels = labels;
        self
    }
}

/// Line and scatter series on a shared pair of axes
#[derive(Debug, Clone, PartialEq)]
pub struct XyChart {
    pub filepath: PathBuf,
    pub title: String,
    pub x: Axis,
    pub y: Axis,
    pub series: Vec<Series>,
    /// Names for x = 0, 1, 2, ... when the x axis is categorical
    pub categories: Option<Vec<String>>,
    pub size: (u32, u32),
}

impl XyChart {
    pub fn new(filepath: PathBuf, title: impl Into<String>, x: Axis, y: Axis) -> Self {
        Self {
            filepath,
            title: title.into(),
            x,
            y,
            series: Vec::new(),
            categories: None,
            size: DEFAULT_SIZE,
        }
    }

    pub fn with_series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }

    /// Whether both axes can place `point`
    pub fn accepts(&self, point: (f64, f64)) -> bool {
        self.x.scale.accepts(point.0) && self.y.scale.accepts(point.1)
    }

    /// True when at least one point survives the axis scales
    pub fn has_data(&self) -> bool {
        self.series
            .iter()
            .flat_map(|s| s.points.iter())
            .any(|p| self.accepts(*p))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarGroup {
    pub label: Option<String>,
    pub color: Rgb,
    /// One value per category, `None` leaves a gap
    pub values: Vec<Option<f64>>,
    /// Symmetric error per category
    pub errors: Vec<Option<f64>>,
}

impl BarGroup {
    pub fn new(values: Vec<Option<f64>>, color: Rgb) -> Self {
        Self {
            label: None,
            color,
            values,
            errors: Vec::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_errors(mut self, errors: Vec<Option<f64>>) -> Self {
        self.errors = errors;
        self
    }
}

/// Text printed above each bar, e.g. `1.23x`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarAnnotation {
    pub precision: usize,
    pub suffix: String,
}

impl BarAnnotation {
    pub fn format(&self, value: f64) -> String {
        format!("{value:.prec$}{}", self.suffix, prec = self.precision)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarChart {
    pub filepath: PathBuf,
    pub title: String,
    pub x_label: Option<String>,
    pub y_label: String,
    pub categories: Vec<String>,
    pub groups: Vec<BarGroup>,
    pub annotation: Option<BarAnnotation>,
    pub size: (u32, u32),
}

impl BarChart {
    pub fn new(
        filepath: PathBuf,
        title: impl Into<String>,
        y_label: impl Into<String>,
        categories: Vec<String>,
    ) -> Self {
        Self {
            filepath,
            title: title.into(),
            x_label: None,
            y_label: y_label.into(),
            categories,
            groups: Vec::new(),
            annotation: None,
            size: DEFAULT_SIZE,
        }
    }

    pub fn with_x_label(mut self, label: impl Into<String>) -> Self {
        self.x_label = Some(label.into());
        self
    }

    pub fn with_group(mut self, group: BarGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_annotation(mut self, precision: usize, suffix: impl Into<String>) -> Self {
        self.annotation = Some(BarAnnotation {
            precision,
            suffix: suffix.into(),
        });
        self
    }

    pub fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }

    pub fn has_data(&self) -> bool {
        self.groups.iter().any(|g| g.values.iter().any(Option::is_some))
    }
}

/// A line on the left y axis and bars on a right y axis over the same x
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayChart {
    pub filepath: PathBuf,
    pub title: String,
    pub x: Axis,
    pub line_axis: String,
    pub line: Series,
    pub bar_axis: String,
    pub bars: Vec<(f64, f64)>,
    pub bar_color: Rgb,
    /// Bar width as a fraction of its x value
    pub bar_width: f64,
    pub size: (u32, u32),
}

impl OverlayChart {
    pub fn has_data(&self) -> bool {
        self.line
            .points
            .iter()
            .any(|p| self.x.scale.accepts(p.0) && p.1.is_finite())
            || self.bars.iter().any(|b| self.x.scale.accepts(b.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Chart {
    Xy(XyChart),
    Bar(BarChart),
    Overlay(OverlayChart),
}

impl Chart {
    pub fn filepath(&self) -> &Path {
        match self {
            Chart::Xy(x) => &x.filepath,
            Chart::Bar(x) => &x.filepath,
            Chart::Overlay(x) => &x.filepath,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Chart::Xy(x) => &x.title,
            Chart::Bar(x) => &x.title,
            Chart::Overlay(x) => &x.title,
        }
    }

    pub fn has_data(&self) -> bool {
        match self {
            Chart::Xy(x) => x.has_data(),
            Chart::Bar(x) => x.has_data(),
            Chart::Overlay(x) => x.has_data(),
        }
    }
}

impl From<XyChart> for Chart {
    fn from(value: XyChart) -> Self {
        Chart::Xy(value)
    }
}

impl From<BarChart> for Chart {
    fn from(value: BarChart) -> Self {
        Chart::Bar(value)
    }
}

impl From<OverlayChart> for Chart {
    fn from(value: OverlayChart) -> Self {
        Chart::Overlay(value)
    }
}

pub const DEFAULT_SIZE: (u32, u32) = (1024, 768);
