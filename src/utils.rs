// 该文件是 Qianli （千里眼） 项目的一部分。
// src/utils.rs - URL 查询参数工具
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::str::FromStr;

use thiserror::Error;
use url::Url;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("查询参数 {key} 的值无效: {value}")]
pub struct QueryParamError {
  pub key: String,
  pub value: String,
}

pub fn query_param(url: &Url, key: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == key)
    .map(|(_, v)| v.into_owned())
}

pub fn parse_query_param<T: FromStr>(url: &Url, key: &str) -> Result<Option<T>, QueryParamError> {
  match query_param(url, key) {
    Some(value) => value
      .parse()
      .map(Some)
      .map_err(|_| QueryParamError {
        key: key.to_string(),
        value,
      }),
    None => Ok(None),
  }
}

/// 布尔开关：`?flag`、`?flag=true`、`?flag=1` 为真，`?flag=false`、`?flag=0` 为假
pub fn query_flag(url: &Url, key: &str) -> Result<Option<bool>, QueryParamError> {
  match query_param(url, key) {
    None => Ok(None),
    Some(value) => match value.as_str() {
      "" | "true" | "1" | "yes" => Ok(Some(true)),
      "false" | "0" | "no" => Ok(Some(false)),
      _ => Err(QueryParamError {
        key: key.to_string(),
        value,
      }),
    },
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_typed_values() {
    let url = Url::parse("yolo11:///m.onnx?threshold=0.3&size=320&bad=x").unwrap();
    assert_eq!(parse_query_param::<f32>(&url, "threshold"), Ok(Some(0.3)));
    assert_eq!(parse_query_param::<u32>(&url, "size"), Ok(Some(320)));
    assert_eq!(parse_query_param::<u32>(&url, "stride"), Ok(None));
    assert!(parse_query_param::<u32>(&url, "bad").is_err());
  }

  #[test]
  fn flags_accept_bare_keys() {
    let url = Url::parse("folder:///tmp/out?record&always=false&clip=maybe").unwrap();
    assert_eq!(query_flag(&url, "record"), Ok(Some(true)));
    assert_eq!(query_flag(&url, "always"), Ok(Some(false)));
    assert_eq!(query_flag(&url, "missing"), Ok(None));
    assert!(query_flag(&url, "clip").is_err());
  }
}
