use std::fmt;
use std::str::FromStr;

use crate::geometry::BBox;

/// A table region on one page, written `page:x0,y0,x1,y1` in top-left
/// origin page units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionSpec {
    pub page: u32,
    pub bbox: BBox,
}

impl FromStr for RegionSpec {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (page_part, rect_part) = spec
            .split_once(':')
            .ok_or_else(|| format!("invalid region format '{spec}', expected page:x0,y0,x1,y1"))?;

        let page: u32 = page_part
            .trim()
            .parse()
            .map_err(|_| format!("invalid page number in region: '{page_part}'"))?;
        if page == 0 {
            return Err("region page number must be >= 1".to_string());
        }

        let bbox = BBox::from_str(rect_part)?;
        Ok(Self { page, bbox })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Csv,
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Markdown => "markdown",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "markdown" | "md" => Ok(Self::Markdown),
            other => Err(format!("unknown output format '{other}', expected csv or markdown")),
        }
    }
}
