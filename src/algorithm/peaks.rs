//! CFAR thresholding, peak finding, merging and selection.

use core::fmt;

use crate::algorithm::Axis;

/// A peak output buffer was too small; `count` peaks were stored before the
/// capacity ran out.
///
/// A buffer of `data_length / 2` elements can never overflow, since peaks
/// need at least two samples each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CapacityExceeded {
    /// Number of peaks stored before the overflow
    pub count: usize,
}

impl fmt::Display for CapacityExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peak buffer full after {} peaks", self.count)
    }
}

/// Computes the one-sided CFAR threshold at `idx`.
///
/// The threshold is the mean of `window_length` samples on each side of a
/// guard region of `half_guard_length` samples around `idx`, plus
/// `sensitivity`. Indices too close to either edge for a full window get an
/// infinite threshold and can never produce a detection.
pub fn cfar_threshold(
    data: &[f32],
    window_length: usize,
    half_guard_length: usize,
    sensitivity: f32,
    idx: usize,
) -> f32 {
    let start_idx = window_length + half_guard_length;
    let end_idx = data.len() - start_idx;

    if idx < start_idx || idx >= end_idx {
        return f32::INFINITY;
    }

    let close_start = idx - half_guard_length - window_length;
    let far_start = idx + half_guard_length + 1;

    let mut sum = 0.0f32;
    let mut count = 0usize;

    for k in 0..window_length {
        sum += data[close_start + k];
        sum += data[far_start + k];
        count += 2;
    }

    let threshold = if count > 0 { sum / count as f32 } else { 0.0 };

    threshold + sensitivity
}

/// Computes the mirrored one-sided CFAR threshold at `idx` for a spectrum
/// that is symmetric around `middle_idx` (a velocity spectrum after
/// fftshift).
///
/// Each half uses a window on its outer side only, extended flatly beyond
/// the margin so every index has a defined threshold even for short spectra.
/// Returns `(window mean + global min) / sensitivity`.
pub fn mirrored_cfar_threshold(
    data: &[f32],
    middle_idx: usize,
    window_length: usize,
    half_guard_length: usize,
    sensitivity: f32,
    idx: usize,
) -> f32 {
    let data_length = data.len();
    let margin = window_length + half_guard_length;
    let half_len_without_margin =
        libm::roundf(data_length as f32 / 2.0 - margin as f32) as usize;

    let mut min = f32::INFINITY;
    for &value in data {
        min = min.min(value);
    }

    let mut sum = 0.0f32;

    if idx <= margin {
        for &value in &data[..window_length] {
            sum += value;
        }
    }

    if idx > margin && idx < middle_idx {
        for &value in &data[idx - margin..idx - margin + window_length] {
            sum += value;
        }
    }

    if idx >= middle_idx && idx < data_length - margin - 1 {
        let base = data_length - half_len_without_margin + idx - middle_idx;
        for j in 0..window_length {
            sum += data[base - j];
        }
    }

    if idx >= data_length - margin - 1 {
        for j in 0..window_length {
            sum += data[data_length - j - 1];
        }
    }

    ((sum / window_length as f32) + min) / sensitivity
}

/// Finds local maxima of `abs_sweep` among samples passing the threshold
/// mask.
///
/// A candidate needs two consecutive above-threshold samples with the left
/// one smaller. The candidate then slides forward while the sequence keeps
/// growing and is accepted at the first strictly smaller sample, provided
/// the sample after the peak is still above threshold. Peak indices are
/// written to `peak_idxs`; returns the number of peaks found, or
/// [`CapacityExceeded`] with the partial count if `peak_idxs` is too small.
pub fn find_peaks(
    abs_sweep: &[f32],
    threshold_check: &[bool],
    peak_idxs: &mut [usize],
) -> Result<usize, CapacityExceeded> {
    let data_length = abs_sweep.len();
    let mut success = true;
    let mut found_peaks = 0usize;
    let mut i = 1usize;

    while i < data_length {
        if !threshold_check[i - 1] {
            i += 1;
            continue;
        }

        if !threshold_check[i] {
            i += 2;
            continue;
        }

        if abs_sweep[i - 1] >= abs_sweep[i] {
            i += 1;
            continue;
        }

        // Candidate found at abs_sweep[i]; scan for an upper bound that is
        // smaller than the candidate but still above threshold.
        let mut d_upper = i + 1;
        let mut upper_done = false;

        while !upper_done {
            if d_upper >= data_length - 1 {
                upper_done = true;
            } else if !threshold_check[d_upper] {
                upper_done = true;
            } else if abs_sweep[d_upper] > abs_sweep[i] {
                // Still growing; the larger value becomes the candidate.
                i = d_upper;
                d_upper += 1;
            } else if abs_sweep[d_upper] < abs_sweep[i] {
                // The sample after the candidate must also pass the
                // threshold, otherwise a trailing plateau right at the
                // threshold would produce a spurious peak.
                if threshold_check[i + 1] {
                    if found_peaks < peak_idxs.len() {
                        peak_idxs[found_peaks] = i;
                        found_peaks += 1;
                    } else {
                        success = false;
                    }
                }

                upper_done = true;
            } else {
                d_upper += 1;
            }
        }

        i = d_upper;
    }

    if success {
        Ok(found_peaks)
    } else {
        Err(CapacityExceeded { count: found_peaks })
    }
}

fn merge_peak_cluster(
    start_idx: usize,
    num_peaks: usize,
    velocities: &[f32],
    energies: &[f32],
    peak_idxs: &[usize],
    merged_velocities: &mut [f32],
    merged_energies: &mut [f32],
    cluster_count: usize,
) {
    let mut velocity_sum = 0.0f32;
    let mut energy_sum = 0.0f32;

    for i in 0..num_peaks {
        velocity_sum += velocities[peak_idxs[start_idx + i]];
        energy_sum += energies[peak_idxs[start_idx + i]];
    }

    merged_velocities[cluster_count] = velocity_sum / num_peaks as f32;
    merged_energies[cluster_count] = energy_sum / num_peaks as f32;
}

/// Merges consecutive peaks whose velocity gap is below
/// `max_peak_separation` into clusters, averaging velocity and energy per
/// cluster.
///
/// `peak_idxs` must be ordered by velocity. Returns the number of merged
/// peaks, or [`CapacityExceeded`] if the output buffers are too small.
pub fn merge_peaks(
    max_peak_separation: f32,
    velocities: &[f32],
    energies: &[f32],
    peak_idxs: &[usize],
    merged_velocities: &mut [f32],
    merged_energies: &mut [f32],
) -> Result<usize, CapacityExceeded> {
    let num_peaks = peak_idxs.len();
    let capacity = merged_velocities.len().min(merged_energies.len());
    let mut cluster_count = 0usize;
    let mut cluster_start_idx = 0usize;

    if num_peaks > 1 {
        for i in 0..num_peaks - 1 {
            let current_idx = peak_idxs[i];
            let next_idx = peak_idxs[i + 1];
            let num_peaks_in_cluster = i - cluster_start_idx + 1;

            if (velocities[next_idx] - velocities[current_idx]) < max_peak_separation {
                continue;
            }

            if cluster_count >= capacity {
                return Err(CapacityExceeded {
                    count: cluster_count,
                });
            }

            merge_peak_cluster(
                cluster_start_idx,
                num_peaks_in_cluster,
                velocities,
                energies,
                peak_idxs,
                merged_velocities,
                merged_energies,
                cluster_count,
            );

            cluster_count += 1;
            cluster_start_idx = i + 1;
        }
    }

    if cluster_start_idx < num_peaks {
        if cluster_count >= capacity {
            return Err(CapacityExceeded {
                count: cluster_count,
            });
        }

        merge_peak_cluster(
            cluster_start_idx,
            num_peaks - cluster_start_idx,
            velocities,
            energies,
            peak_idxs,
            merged_velocities,
            merged_energies,
            cluster_count,
        );

        cluster_count += 1;
    }

    Ok(cluster_count)
}

/// Selects a velocity among candidate peaks.
///
/// Prefers the velocity of the highest-energy peak with `|velocity| >=
/// limit`; peaks inside the slow zone are only used when no peak outside it
/// exists, again picking the one with the highest energy. Returns 0.0 when
/// there are no peaks.
///
/// With `peak_idxs` the candidate peaks are `velocities[peak_idxs[i]]`,
/// without it the slices are used directly.
pub fn peak_velocity(
    velocities: &[f32],
    energies: &[f32],
    peak_idxs: Option<&[usize]>,
    limit: f32,
) -> f32 {
    let count = peak_idxs.map_or(velocities.len(), |idxs| idxs.len());

    let mut slow_velocity = 0.0f32;
    let mut valid_velocity = 0.0f32;
    let mut has_valid = false;
    let mut biggest_energy_slow = f32::NEG_INFINITY;
    let mut biggest_energy_valid = f32::NEG_INFINITY;

    for i in 0..count {
        let idx = peak_idxs.map_or(i, |idxs| idxs[i]);
        let velocity = velocities[idx];
        let energy = energies[idx];
        let abs_velocity = if velocity < 0.0 { -velocity } else { velocity };

        if abs_velocity < limit {
            if energy > biggest_energy_slow {
                slow_velocity = velocity;
                biggest_energy_slow = energy;
            }
        } else if energy > biggest_energy_valid {
            valid_velocity = velocity;
            biggest_energy_valid = energy;
            has_valid = true;
        }
    }

    if has_valid {
        valid_velocity
    } else {
        slow_velocity
    }
}

/// Finds the column of the largest element in a row-major PSD matrix,
/// skipping the slow-zone rows `middle_idx - half_slow_zone..middle_idx +
/// half_slow_zone`.
pub fn distance_index(
    data: &[f32],
    cols: usize,
    middle_idx: usize,
    half_slow_zone: usize,
) -> usize {
    let rows = data.len() / cols;
    let mut max = f32::NEG_INFINITY;
    let mut idx = 0usize;

    for i in 0..rows {
        if i < middle_idx + half_slow_zone && i + half_slow_zone >= middle_idx {
            continue;
        }

        for j in 0..cols {
            if data[(i * cols) + j] > max {
                max = data[(i * cols) + j];
                idx = j;
            }
        }
    }

    idx
}

/// Counts elements above `threshold` along `axis` of a row-major matrix.
///
/// With [`Axis::Row`] one count per column is produced, with [`Axis::Col`]
/// one count per row. Only `check_length` entries starting at `offset` of
/// `count` are written.
pub fn count_points_above_threshold(
    matrix: &[f32],
    cols: usize,
    threshold: f32,
    count: &mut [usize],
    offset: usize,
    check_length: usize,
    axis: Axis,
) {
    let rows = matrix.len() / cols;

    match axis {
        Axis::Col => {
            for r in offset..check_length + offset {
                count[r] = 0;
                for c in 0..cols {
                    if matrix[c + (r * cols)] > threshold {
                        count[r] += 1;
                    }
                }
            }
        }
        Axis::Row => {
            for c in offset..check_length + offset {
                count[c] = 0;
                for r in 0..rows {
                    if matrix[c + (r * cols)] > threshold {
                        count[c] += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cfar_threshold_on_flat_input() {
        let data = [2.0f32; 32];

        // Interior indices see mean == input value plus the sensitivity.
        for idx in 6..26 {
            assert_relative_eq!(cfar_threshold(&data, 4, 2, 0.5, idx), 2.5, epsilon = 1e-6);
        }

        // Edge indices can never be exceeded.
        assert_eq!(cfar_threshold(&data, 4, 2, 0.5, 0), f32::INFINITY);
        assert_eq!(cfar_threshold(&data, 4, 2, 0.5, 5), f32::INFINITY);
        assert_eq!(cfar_threshold(&data, 4, 2, 0.5, 26), f32::INFINITY);
        assert_eq!(cfar_threshold(&data, 4, 2, 0.5, 31), f32::INFINITY);
    }

    #[test]
    fn mirrored_cfar_on_flat_input() {
        let data = [3.0f32; 64];

        // Window mean and global min are both the input value.
        for idx in 0..64 {
            let threshold = mirrored_cfar_threshold(&data, 32, 6, 6, 2.0, idx);
            assert_relative_eq!(threshold, 3.0, epsilon = 1e-6);
        }
    }

    #[test]
    fn find_peaks_growing_slope_with_trailing_plateau() {
        let abs_sweep = [1.0f32, 2.0, 3.0, 4.0, 2.0, 2.0];
        let threshold_check = [true; 6];
        let mut peak_idxs = [0usize; 3];

        let num_peaks = find_peaks(&abs_sweep, &threshold_check, &mut peak_idxs).unwrap();

        assert_eq!(num_peaks, 1);
        assert_eq!(peak_idxs[0], 3);
    }

    #[test]
    fn find_peaks_rejects_peak_with_below_threshold_successor() {
        let abs_sweep = [1.0f32, 2.0, 3.0, 4.0, 1.0, 1.0];
        let threshold_check = [true, true, true, true, false, false];
        let mut peak_idxs = [0usize; 3];

        let num_peaks = find_peaks(&abs_sweep, &threshold_check, &mut peak_idxs).unwrap();

        assert_eq!(num_peaks, 0);
    }

    #[test]
    fn find_peaks_multiple_maxima() {
        let abs_sweep = [0.0f32, 1.0, 3.0, 1.0, 1.0, 4.0, 2.0, 2.0, 5.0, 3.0, 3.0];
        let threshold_check = [true; 11];
        let mut peak_idxs = [0usize; 5];

        let num_peaks = find_peaks(&abs_sweep, &threshold_check, &mut peak_idxs).unwrap();

        assert_eq!(num_peaks, 3);
        assert_eq!(&peak_idxs[..3], &[2, 5, 8]);
    }

    #[test]
    fn find_peaks_reports_capacity_overflow() {
        let abs_sweep = [0.0f32, 1.0, 3.0, 1.0, 1.0, 4.0, 2.0, 2.0, 5.0, 3.0, 3.0];
        let threshold_check = [true; 11];
        let mut peak_idxs = [0usize; 2];

        let err = find_peaks(&abs_sweep, &threshold_check, &mut peak_idxs).unwrap_err();

        assert_eq!(err.count, 2);
        assert_eq!(&peak_idxs[..2], &[2, 5]);
    }

    #[test]
    fn merging_an_isolated_peak_is_identity() {
        let velocities = [1.5f32];
        let energies = [7.0f32];
        let peak_idxs = [0usize];
        let mut merged_v = [0.0f32; 4];
        let mut merged_e = [0.0f32; 4];

        let merged = merge_peaks(0.2, &velocities, &energies, &peak_idxs, &mut merged_v, &mut merged_e)
            .unwrap();

        assert_eq!(merged, 1);
        assert_relative_eq!(merged_v[0], 1.5);
        assert_relative_eq!(merged_e[0], 7.0);
    }

    #[test]
    fn close_peaks_merge_into_one_cluster() {
        let velocities = [1.0f32, 1.1, 1.2, 3.0];
        let energies = [2.0f32, 4.0, 6.0, 8.0];
        let peak_idxs = [0usize, 1, 2, 3];
        let mut merged_v = [0.0f32; 4];
        let mut merged_e = [0.0f32; 4];

        let merged = merge_peaks(0.5, &velocities, &energies, &peak_idxs, &mut merged_v, &mut merged_e)
            .unwrap();

        assert_eq!(merged, 2);
        assert_relative_eq!(merged_v[0], 1.1, epsilon = 1e-6);
        assert_relative_eq!(merged_e[0], 4.0, epsilon = 1e-6);
        assert_relative_eq!(merged_v[1], 3.0, epsilon = 1e-6);
        assert_relative_eq!(merged_e[1], 8.0, epsilon = 1e-6);
    }

    #[test]
    fn merge_peaks_reports_capacity_overflow() {
        let velocities = [1.0f32, 3.0, 5.0];
        let energies = [1.0f32, 1.0, 1.0];
        let peak_idxs = [0usize, 1, 2];
        let mut merged_v = [0.0f32; 1];
        let mut merged_e = [0.0f32; 1];

        let err = merge_peaks(0.5, &velocities, &energies, &peak_idxs, &mut merged_v, &mut merged_e)
            .unwrap_err();

        assert_eq!(err.count, 1);
    }

    #[test]
    fn peak_velocity_prefers_fast_peaks_over_stronger_slow_ones() {
        // The slow peak has much more energy, but a fast peak exists.
        let velocities = [0.05f32, 1.0];
        let energies = [100.0f32, 1.0];

        let velocity = peak_velocity(&velocities, &energies, None, 0.5);
        assert_relative_eq!(velocity, 1.0);
    }

    #[test]
    fn peak_velocity_falls_back_to_strongest_slow_peak() {
        let velocities = [0.05f32, -0.2, 0.1];
        let energies = [1.0f32, 5.0, 2.0];

        let velocity = peak_velocity(&velocities, &energies, None, 0.5);
        assert_relative_eq!(velocity, -0.2);
    }

    #[test]
    fn distance_index_skips_slow_zone() {
        // 4 rows x 2 cols; the global max sits in the slow zone rows.
        let data = [
            1.0f32, 0.0, //
            9.0, 0.0, //
            9.5, 0.0, //
            0.0, 2.0,
        ];

        let idx = distance_index(&data, 2, 2, 1);
        assert_eq!(idx, 1);
    }

    #[test]
    fn count_above_threshold_per_point() {
        // 3 sweeps x 2 points
        let matrix = [
            1.0f32, 5.0, //
            2.0, 5.0, //
            3.0, 0.0,
        ];
        let mut count = [0usize; 2];

        count_points_above_threshold(&matrix, 2, 1.5, &mut count, 0, 2, Axis::Row);
        assert_eq!(count, [2, 2]);
    }
}
