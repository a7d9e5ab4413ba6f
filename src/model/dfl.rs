// 该文件是 Qianli （千里眼） 项目的一部分。
// src/model/dfl.rs - 分布式边框解码 (DFL)
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

/// 每条边的分布 bin 数
pub const DFL_BINS: usize = 16;

/// 对一条边的 bin 分布做 softmax 后求期望，得到以网格为单位的偏移量
///
/// 切片长度即为 bin 数。先减去最大值再取指数，保证数值稳定。
/// 对有限输入，结果位于 `[0, bins - 1]`。
pub fn softmax_expectation(bins: &[f32]) -> f32 {
  if bins.is_empty() {
    return 0.0;
  }

  let max = bins.iter().copied().fold(f32::NEG_INFINITY, f32::max);
  let sum: f32 = bins.iter().map(|&v| (v - max).exp()).sum();

  let expectation: f32 = bins
    .iter()
    .enumerate()
    .map(|(i, &v)| i as f32 * ((v - max).exp() / sum))
    .sum();

  expectation.clamp(0.0, (bins.len() - 1) as f32)
}

/// 解码一个网格单元的四条边 (left, top, right, bottom)
///
/// `box_channels` 的长度必须为 `4 * bins`。
pub fn decode_edges(box_channels: &[f32], bins: usize) -> [f32; 4] {
  let mut edges = [0.0f32; 4];
  if bins == 0 {
    return edges;
  }
  for (edge, chunk) in edges.iter_mut().zip(box_channels.chunks_exact(bins)) {
    *edge = softmax_expectation(chunk);
  }
  edges
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equal_bins_decode_to_center() {
    for value in [0.0f32, 1.0, -3.5, 42.0] {
      let bins = [value; DFL_BINS];
      assert_eq!(softmax_expectation(&bins), 7.5);
    }
  }

  #[test]
  fn first_bin_dominant_decodes_near_zero() {
    let mut bins = [0.0f32; DFL_BINS];
    bins[0] = 10.0;
    let offset = softmax_expectation(&bins);
    assert!(offset < 0.01, "offset = {}", offset);
  }

  #[test]
  fn last_bin_dominant_decodes_near_fifteen() {
    let mut bins = [0.0f32; DFL_BINS];
    bins[DFL_BINS - 1] = 10.0;
    let offset = softmax_expectation(&bins);
    assert!(offset > 14.99, "offset = {}", offset);
  }

  #[test]
  fn output_stays_in_bin_range() {
    let cases: [[f32; DFL_BINS]; 4] = [
      [0.0; DFL_BINS],
      [-80.0, 80.0, -80.0, 80.0, -80.0, 80.0, -80.0, 80.0, -80.0, 80.0, -80.0, 80.0, -80.0, 80.0, -80.0, 80.0],
      [1e30, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
      [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1e30],
    ];
    for bins in cases.iter() {
      let offset = softmax_expectation(bins);
      assert!((0.0..=15.0).contains(&offset), "offset = {}", offset);
    }
  }

  #[test]
  fn two_equal_peaks_average() {
    let mut bins = [-1e4f32; DFL_BINS];
    bins[2] = 0.0;
    bins[4] = 0.0;
    assert_eq!(softmax_expectation(&bins), 3.0);
  }

  #[test]
  fn bin_count_follows_slice_length() {
    assert_eq!(softmax_expectation(&[0.0; 8]), 3.5);
    assert_eq!(softmax_expectation(&[]), 0.0);
  }

  #[test]
  fn edges_decode_independently() {
    let mut channels = vec![-1e4f32; 4 * DFL_BINS];
    for (edge, bin) in [1usize, 3, 0, 15].iter().enumerate() {
      channels[edge * DFL_BINS + bin] = 0.0;
    }
    assert_eq!(decode_edges(&channels, DFL_BINS), [1.0, 3.0, 0.0, 15.0]);
  }
}
