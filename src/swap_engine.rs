//! # Swap Engine
//!
//! Turns an LDF plus the pool's balances into a concrete swap:
//!
//! 1. try a single constant-liquidity step inside the current rounded tick
//! 2. otherwise ask the LDF for the rounded tick where the whole amount is consumed
//! 3. step across that tick (with [`EPSILON_FEE`]) and derive the active balances from the
//!    cumulative amounts the LDF returned
//! 4. when neither works within the price limit, settle at the limit and recompute the balances there

use ethers::types::U256;

use crate::error::{Result, SwapError};
use crate::fees::EPSILON_FEE;
use crate::hook::idle_balance::IdleBalance;
use crate::ldf::{Ldf, LdfQueryInput, LdfState, LdfSwapInput};
use crate::math::liquidity_amounts::get_amounts_for_liquidity;
use crate::math::swap_math::{compute_swap_step, get_sqrt_price_target, SwapStep};
use crate::math::{
    full_mul_div, full_mul_x96, full_mul_x96_up, get_sqrt_price_at_tick, get_tick_at_sqrt_price, max_usable_tick,
    min_usable_tick, round_tick, round_up_full_mul_div_result, sub_relu, Q96,
};

/// A distribution bound to one pool's params and tick spacing.
#[derive(Debug, Clone, Copy)]
pub struct LdfContext<'a> {
    pub ldf: &'a Ldf,
    pub params: [u8; 32],
    pub tick_spacing: i32,
}

/// Liquidity implied by the pool's balances at a given price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdfLiquidity {
    pub total_liquidity: U256,
    pub total_density0_x96: U256,
    pub total_density1_x96: U256,
    pub liquidity_density_of_rounded_tick_x96: U256,
    pub active_balance0: U256,
    pub active_balance1: U256,
    pub new_state: LdfState,
    pub should_surge: bool,
}

/// Query the LDF at `tick` and size the total liquidity so that neither balance is overdrawn.
///
/// Idle balance is excluded from the balances unless the query itself signals a surge.
#[allow(clippy::too_many_arguments)]
pub fn query_ldf(
    ctx: &LdfContext<'_>,
    sqrt_price_x96: U256,
    tick: i32,
    arithmetic_mean_tick: i32,
    ldf_state: LdfState,
    balance0: U256,
    balance1: U256,
    idle_balance: &IdleBalance,
) -> Result<LdfLiquidity> {
    let (rounded_tick, next_rounded_tick) = round_tick(tick, ctx.tick_spacing);
    let rounded_tick_sqrt_price = get_sqrt_price_at_tick(rounded_tick)?;
    let next_rounded_tick_sqrt_price = get_sqrt_price_at_tick(next_rounded_tick)?;

    let query = ctx.ldf.query(&LdfQueryInput {
        rounded_tick,
        twap_tick: arithmetic_mean_tick,
        spot_price_tick: tick,
        tick_spacing: ctx.tick_spacing,
        params: ctx.params,
        state: ldf_state,
    })?;

    let (density0_of_rounded_tick, density1_of_rounded_tick) = get_amounts_for_liquidity(
        sqrt_price_x96,
        rounded_tick_sqrt_price,
        next_rounded_tick_sqrt_price,
        query.liquidity_density_x96,
        true,
    )?;
    let total_density0_x96 = query
        .cumulative_amount0_density_x96
        .checked_add(density0_of_rounded_tick)
        .ok_or(SwapError::Overflow)?;
    let total_density1_x96 = query
        .cumulative_amount1_density_x96
        .checked_add(density1_of_rounded_tick)
        .ok_or(SwapError::Overflow)?;

    let (balance0, balance1) =
        if query.should_surge { (balance0, balance1) } else { idle_balance.exclude_from(balance0, balance1) };

    let mut total_liquidity = U256::zero();
    let mut active_balance0 = U256::zero();
    let mut active_balance1 = U256::zero();

    if !balance0.is_zero() || !balance1.is_zero() {
        let no_token0 = balance0.is_zero() || total_density0_x96.is_zero();
        let no_token1 = balance1.is_zero() || total_density1_x96.is_zero();
        let estimate0 = if no_token0 { U256::zero() } else { full_mul_div(balance0, Q96, total_density0_x96)? };
        let estimate1 = if no_token1 { U256::zero() } else { full_mul_div(balance1, Q96, total_density1_x96)? };

        // size by whichever token is scarcer
        let use_estimate0 = (estimate0 < estimate1 || total_density1_x96.is_zero()) && !total_density0_x96.is_zero();
        if use_estimate0 {
            if !no_token0 {
                total_liquidity = round_up_full_mul_div_result(balance0, Q96, total_density0_x96, estimate0)?;
                active_balance0 = balance0.min(full_mul_x96(estimate0, total_density0_x96)?);
            }
            if !no_token1 {
                active_balance1 = balance1.min(full_mul_x96(estimate0, total_density1_x96)?);
            }
        } else {
            if !no_token1 {
                total_liquidity = round_up_full_mul_div_result(balance1, Q96, total_density1_x96, estimate1)?;
                active_balance1 = balance1.min(full_mul_x96(estimate1, total_density1_x96)?);
            }
            if !no_token0 {
                active_balance0 = balance0.min(full_mul_x96(estimate1, total_density0_x96)?);
            }
        }
    }

    Ok(LdfLiquidity {
        total_liquidity,
        total_density0_x96,
        total_density1_x96,
        liquidity_density_of_rounded_tick_x96: query.liquidity_density_x96,
        active_balance0,
        active_balance1,
        new_state: query.new_state,
        should_surge: query.should_surge,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapInput {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub total_liquidity: U256,
    pub liquidity_density_of_rounded_tick_x96: U256,
    pub current_active_balance0: U256,
    pub current_active_balance1: U256,
    pub arithmetic_mean_tick: i32,
    pub zero_for_one: bool,
    pub exact_in: bool,
    pub amount_specified: U256,
    pub sqrt_price_limit_x96: U256,
    pub ldf_state: LdfState,
}

/// Price after the swap and the raw amounts exchanged, before hook fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapOutput {
    pub sqrt_price_x96: U256,
    pub tick: i32,
    pub input_amount: U256,
    pub output_amount: U256,
}

/// Tick after a step that started at `start_*` and aimed at `next_*`.
fn tick_after_step(
    result_sqrt_price_x96: U256,
    next_sqrt_price_x96: U256,
    tick_next: i32,
    start_sqrt_price_x96: U256,
    start_tick: i32,
    zero_for_one: bool,
) -> Result<i32> {
    if result_sqrt_price_x96 == next_sqrt_price_x96 {
        Ok(if zero_for_one { tick_next - 1 } else { tick_next })
    } else if result_sqrt_price_x96 != start_sqrt_price_x96 {
        get_tick_at_sqrt_price(result_sqrt_price_x96)
    } else {
        Ok(start_tick)
    }
}

fn step_satisfies(step: &SwapStep, exact_in: bool, amount_specified: U256) -> bool {
    if exact_in {
        step.amount_in == amount_specified
    } else {
        step.amount_out == amount_specified
    }
}

fn checked_sub(a: U256, b: U256) -> Result<U256> {
    a.checked_sub(b).ok_or(SwapError::InvalidSwap)
}

/// Compute the swap against the distribution. See the module docs for the stages.
pub fn compute_swap(ctx: &LdfContext<'_>, input: &SwapInput) -> Result<SwapOutput> {
    compute_swap_staged(ctx, input, true)
}

/// With `fast_path` off, stage 1 is skipped and a tick located in the current segment is
/// stepped through stage 3 from the segment's boundary instead of deferring to stage 1.
pub(crate) fn compute_swap_staged(ctx: &LdfContext<'_>, input: &SwapInput, fast_path: bool) -> Result<SwapOutput> {
    let tick_spacing = ctx.tick_spacing;
    let zero_for_one = input.zero_for_one;
    let exact_in = input.exact_in;
    let amount_specified = input.amount_specified;

    let rounded_tick_liquidity =
        U256::try_from(input.total_liquidity.full_mul(input.liquidity_density_of_rounded_tick_x96) >> 96)
            .map_err(|_| SwapError::Overflow)?;

    let min_sqrt_price = get_sqrt_price_at_tick(min_usable_tick(tick_spacing))?;
    let max_sqrt_price = get_sqrt_price_at_tick(max_usable_tick(tick_spacing))?;
    let mut sqrt_price_limit_x96 = input.sqrt_price_limit_x96;
    if zero_for_one && sqrt_price_limit_x96 <= min_sqrt_price {
        sqrt_price_limit_x96 = min_sqrt_price + 1;
    } else if !zero_for_one && sqrt_price_limit_x96 >= max_sqrt_price {
        sqrt_price_limit_x96 = max_sqrt_price - 1;
    }

    let output_balance = if zero_for_one { input.current_active_balance1 } else { input.current_active_balance0 };
    let (rounded_tick, next_rounded_tick) = round_tick(input.tick, tick_spacing);
    let tick_next = if zero_for_one { rounded_tick } else { next_rounded_tick };
    let sqrt_price_next_x96 = get_sqrt_price_at_tick(tick_next)?;

    let naive_result = |step: &SwapStep| -> Result<SwapOutput> {
        let tick = tick_after_step(
            step.sqrt_price_next_x96,
            sqrt_price_next_x96,
            tick_next,
            input.sqrt_price_x96,
            input.tick,
            zero_for_one,
        )?;
        Ok(SwapOutput {
            sqrt_price_x96: step.sqrt_price_next_x96,
            tick,
            input_amount: step.amount_in,
            output_amount: step.amount_out.min(output_balance),
        })
    };

    // stage 1: stay inside the current rounded tick
    let mut naive_step = None;
    if fast_path && !rounded_tick_liquidity.is_zero() {
        let step = compute_swap_step(
            exact_in,
            input.sqrt_price_x96,
            get_sqrt_price_target(zero_for_one, sqrt_price_next_x96, sqrt_price_limit_x96),
            rounded_tick_liquidity,
            amount_specified,
            0,
        )?;
        if step_satisfies(&step, exact_in, amount_specified) {
            return naive_result(&step);
        }
        naive_step = Some(step);
    }

    // stage 2: locate the rounded tick that absorbs the whole amount
    let inverse_cumulative_amount_input = if exact_in {
        let balance = if zero_for_one { input.current_active_balance0 } else { input.current_active_balance1 };
        balance.checked_add(amount_specified).ok_or(SwapError::Overflow)?
    } else {
        output_balance.checked_sub(amount_specified).ok_or(SwapError::RequestedOutputExceedsBalance)?
    };

    let located = ctx.ldf.compute_swap(&LdfSwapInput {
        inverse_cumulative_amount_input,
        total_liquidity: input.total_liquidity,
        zero_for_one,
        exact_in,
        twap_tick: input.arithmetic_mean_tick,
        spot_price_tick: input.tick,
        tick_spacing,
        params: ctx.params,
        state: input.ldf_state,
    })?;

    if located.success {
        let in_current_segment = (zero_for_one && located.rounded_tick >= rounded_tick)
            || (!zero_for_one && located.rounded_tick <= rounded_tick);
        if fast_path && in_current_segment {
            return match naive_step {
                Some(step) => naive_result(&step),
                None => Ok(SwapOutput {
                    sqrt_price_x96: input.sqrt_price_x96,
                    tick: input.tick,
                    input_amount: U256::zero(),
                    output_amount: U256::zero(),
                }),
            };
        }

        // stage 3: step across the located segment
        let (tick_start, tick_end) = if zero_for_one {
            (located.rounded_tick + tick_spacing, located.rounded_tick)
        } else {
            (located.rounded_tick, located.rounded_tick + tick_spacing)
        };
        let start_sqrt_price_x96 = get_sqrt_price_at_tick(tick_start)?;

        if (zero_for_one && sqrt_price_limit_x96 < start_sqrt_price_x96)
            || (!zero_for_one && sqrt_price_limit_x96 > start_sqrt_price_x96)
        {
            let end_sqrt_price_x96 = get_sqrt_price_at_tick(tick_end)?;
            let mut cumulative_amount0 = located.cumulative_amount0;
            let mut cumulative_amount1 = located.cumulative_amount1;
            if zero_for_one {
                cumulative_amount0 = cumulative_amount0.max(input.current_active_balance0);
            } else {
                cumulative_amount1 = cumulative_amount1.max(input.current_active_balance1);
            }

            let mut hit_sqrt_price_limit = false;
            let step = if located.swap_liquidity.is_zero() || sqrt_price_limit_x96 == start_sqrt_price_x96 {
                SwapStep {
                    sqrt_price_next_x96: start_sqrt_price_x96,
                    amount_in: U256::zero(),
                    amount_out: U256::zero(),
                    fee_amount: U256::zero(),
                }
            } else {
                let amount_specified_remaining = if exact_in {
                    let consumed = if zero_for_one { cumulative_amount0 } else { cumulative_amount1 };
                    sub_relu(inverse_cumulative_amount_input, consumed)
                } else {
                    let available = if zero_for_one { cumulative_amount1 } else { cumulative_amount0 };
                    sub_relu(available, inverse_cumulative_amount_input)
                };
                let step = compute_swap_step(
                    exact_in,
                    start_sqrt_price_x96,
                    get_sqrt_price_target(zero_for_one, end_sqrt_price_x96, sqrt_price_limit_x96),
                    located.swap_liquidity,
                    amount_specified_remaining,
                    EPSILON_FEE,
                )?;
                hit_sqrt_price_limit =
                    step.sqrt_price_next_x96 == sqrt_price_limit_x96 && sqrt_price_limit_x96 != end_sqrt_price_x96;
                step
            };

            if !hit_sqrt_price_limit {
                let tick = tick_after_step(
                    step.sqrt_price_next_x96,
                    end_sqrt_price_x96,
                    tick_end,
                    start_sqrt_price_x96,
                    tick_start,
                    zero_for_one,
                )?;

                if step_satisfies(&step, exact_in, amount_specified) {
                    return Ok(SwapOutput {
                        sqrt_price_x96: step.sqrt_price_next_x96,
                        tick,
                        input_amount: step.amount_in,
                        output_amount: step.amount_out.min(output_balance),
                    });
                }

                let output_cumulative = if zero_for_one { cumulative_amount1 } else { cumulative_amount0 };
                if output_cumulative < step.amount_out {
                    return Err(SwapError::InvalidSwap);
                }

                // balances from the cumulative amounts rather than accumulated deltas
                let (input_amount, output_amount) = if zero_for_one {
                    let updated0 = cumulative_amount0.checked_add(step.amount_in).ok_or(SwapError::Overflow)?;
                    let updated1 = cumulative_amount1 - step.amount_out;
                    (checked_sub(updated0, input.current_active_balance0)?, sub_relu(input.current_active_balance1, updated1))
                } else {
                    let updated0 = cumulative_amount0 - step.amount_out;
                    let updated1 = cumulative_amount1.checked_add(step.amount_in).ok_or(SwapError::Overflow)?;
                    (checked_sub(updated1, input.current_active_balance1)?, sub_relu(input.current_active_balance0, updated0))
                };
                return Ok(SwapOutput { sqrt_price_x96: step.sqrt_price_next_x96, tick, input_amount, output_amount });
            }
        }
    }

    // stage 4: settle at the price limit
    let tick = if sqrt_price_limit_x96 == input.sqrt_price_x96 {
        input.tick
    } else {
        get_tick_at_sqrt_price(sqrt_price_limit_x96)?
    };
    let at_limit = query_ldf(
        ctx,
        sqrt_price_limit_x96,
        tick,
        input.arithmetic_mean_tick,
        input.ldf_state,
        U256::zero(),
        U256::zero(),
        &IdleBalance::default(),
    )?;
    let updated0 = full_mul_x96_up(at_limit.total_density0_x96, input.total_liquidity)?;
    let updated1 = full_mul_x96_up(at_limit.total_density1_x96, input.total_liquidity)?;
    let (input_amount, output_amount) = if zero_for_one {
        (checked_sub(updated0, input.current_active_balance0)?, sub_relu(input.current_active_balance1, updated1))
    } else {
        (checked_sub(updated1, input.current_active_balance1)?, sub_relu(input.current_active_balance0, updated0))
    };

    Ok(SwapOutput { sqrt_price_x96: sqrt_price_limit_x96, tick, input_amount, output_amount })
}
